//! REST API client.
//!
//! [`GuildApi`] is the seam between the adapter and the platform's REST
//! endpoints; [`RestApi`] implements it over HTTP.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use guild_core::ApiResult;
use guild_transport::{HttpClient, HttpClientConfig};

use crate::config::AccountToken;
use crate::model::api::{
    Channel, DmsSession, GatewayInfo, Guild, Member, MessageBody, SentMessage, User,
};

/// Page size of `GET /users/@me/guilds`.
pub const GUILD_PAGE_LIMIT: u32 = 100;

/// Page size of `GET /guilds/{id}/members`.
pub const MEMBER_PAGE_LIMIT: u32 = 400;

/// The REST endpoints used by the adapter.
#[async_trait]
pub trait GuildApi: Send + Sync {
    /// `GET /gateway`: the WebSocket URL to connect to.
    async fn gateway_url(&self) -> ApiResult<String>;

    /// `GET /users/@me`.
    async fn me(&self) -> ApiResult<User>;

    /// `GET /users/@me/guilds`, one page.
    async fn me_guilds(&self, after: Option<&str>, limit: u32) -> ApiResult<Vec<Guild>>;

    /// `GET /guilds/{guild_id}`.
    async fn guild(&self, guild_id: &str) -> ApiResult<Guild>;

    /// `GET /guilds/{guild_id}/channels`.
    async fn channels(&self, guild_id: &str) -> ApiResult<Vec<Channel>>;

    /// `GET /channels/{channel_id}`.
    async fn channel(&self, channel_id: &str) -> ApiResult<Channel>;

    /// `GET /guilds/{guild_id}/members`, one page.
    async fn guild_members(
        &self,
        guild_id: &str,
        after: Option<&str>,
        limit: u32,
    ) -> ApiResult<Vec<Member>>;

    /// `GET /guilds/{guild_id}/members/{user_id}`.
    async fn guild_member(&self, guild_id: &str, user_id: &str) -> ApiResult<Member>;

    /// `POST /channels/{channel_id}/messages`.
    async fn post_message(&self, channel_id: &str, body: MessageBody) -> ApiResult<SentMessage>;

    /// `POST /dms/{guild_id}/messages`.
    async fn post_direct_message(
        &self,
        guild_id: &str,
        body: MessageBody,
    ) -> ApiResult<SentMessage>;

    /// `POST /users/@me/dms`: opens a direct message session.
    async fn create_direct_message(
        &self,
        recipient_id: &str,
        source_guild_id: &str,
    ) -> ApiResult<DmsSession>;

    /// `DELETE /channels/{channel_id}/messages/{message_id}`.
    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
        hide_tip: bool,
    ) -> ApiResult<()>;

    /// `DELETE /dms/{guild_id}/messages/{message_id}`.
    async fn delete_direct_message(
        &self,
        guild_id: &str,
        message_id: &str,
        hide_tip: bool,
    ) -> ApiResult<()>;
}

/// [`GuildApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct RestApi {
    http: HttpClient,
}

impl RestApi {
    /// Creates a client for the host and credential of `token`.
    pub fn new(token: &AccountToken) -> ApiResult<Self> {
        Self::with_config(
            HttpClientConfig::new(token.api_base()).with_authorization(token.authorization()),
        )
    }

    /// Creates a client from an explicit HTTP configuration.
    pub fn with_config(config: HttpClientConfig) -> ApiResult<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }

    async fn post_body(&self, path: &str, body: MessageBody) -> ApiResult<SentMessage> {
        if body.is_multipart() {
            self.http.post_multipart(path, body.into_multipart()).await
        } else {
            self.http.post_json(path, &body).await
        }
    }
}

fn page_query(after: Option<&str>, limit: u32) -> Vec<(&'static str, String)> {
    let mut query = vec![("limit", limit.to_string())];
    if let Some(after) = after {
        query.push(("after", after.to_string()));
    }
    query
}

fn hidetip(hide_tip: bool) -> [(&'static str, String); 1] {
    [("hidetip", hide_tip.to_string())]
}

#[async_trait]
impl GuildApi for RestApi {
    async fn gateway_url(&self) -> ApiResult<String> {
        let info: GatewayInfo = self.http.get("/gateway", &[]).await?;
        debug!(url = %info.url, "Resolved gateway");
        Ok(info.url)
    }

    async fn me(&self) -> ApiResult<User> {
        self.http.get("/users/@me", &[]).await
    }

    async fn me_guilds(&self, after: Option<&str>, limit: u32) -> ApiResult<Vec<Guild>> {
        self.http
            .get("/users/@me/guilds", &page_query(after, limit))
            .await
    }

    async fn guild(&self, guild_id: &str) -> ApiResult<Guild> {
        self.http.get(&format!("/guilds/{guild_id}"), &[]).await
    }

    async fn channels(&self, guild_id: &str) -> ApiResult<Vec<Channel>> {
        self.http
            .get(&format!("/guilds/{guild_id}/channels"), &[])
            .await
    }

    async fn channel(&self, channel_id: &str) -> ApiResult<Channel> {
        self.http.get(&format!("/channels/{channel_id}"), &[]).await
    }

    async fn guild_members(
        &self,
        guild_id: &str,
        after: Option<&str>,
        limit: u32,
    ) -> ApiResult<Vec<Member>> {
        let after = Some(after.unwrap_or("0"));
        self.http
            .get(
                &format!("/guilds/{guild_id}/members"),
                &page_query(after, limit),
            )
            .await
    }

    async fn guild_member(&self, guild_id: &str, user_id: &str) -> ApiResult<Member> {
        self.http
            .get(&format!("/guilds/{guild_id}/members/{user_id}"), &[])
            .await
    }

    async fn post_message(&self, channel_id: &str, body: MessageBody) -> ApiResult<SentMessage> {
        self.post_body(&format!("/channels/{channel_id}/messages"), body)
            .await
    }

    async fn post_direct_message(
        &self,
        guild_id: &str,
        body: MessageBody,
    ) -> ApiResult<SentMessage> {
        self.post_body(&format!("/dms/{guild_id}/messages"), body)
            .await
    }

    async fn create_direct_message(
        &self,
        recipient_id: &str,
        source_guild_id: &str,
    ) -> ApiResult<DmsSession> {
        let body = json!({
            "recipient_id": recipient_id,
            "source_guild_id": source_guild_id,
        });
        self.http.post_json("/users/@me/dms", &body).await
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
        hide_tip: bool,
    ) -> ApiResult<()> {
        self.http
            .delete(
                &format!("/channels/{channel_id}/messages/{message_id}"),
                &hidetip(hide_tip),
            )
            .await
    }

    async fn delete_direct_message(
        &self,
        guild_id: &str,
        message_id: &str,
        hide_tip: bool,
    ) -> ApiResult<()> {
        self.http
            .delete(
                &format!("/dms/{guild_id}/messages/{message_id}"),
                &hidetip(hide_tip),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query() {
        assert_eq!(page_query(None, 100), vec![("limit", "100".to_string())]);
        assert_eq!(
            page_query(Some("42"), 400),
            vec![("limit", "400".to_string()), ("after", "42".to_string())]
        );
    }

    #[test]
    fn test_rest_api_uses_token_host() {
        let token: AccountToken = "1:1:1:x".parse().unwrap();
        let api = RestApi::new(&token).unwrap();
        assert_eq!(api.http.base_url(), crate::config::SANDBOX_API_BASE);
    }
}
