//! Entity registry.
//!
//! Per-account caches of the users and channels the adapter has seen. Entries
//! are upserted on every inbound message and by the on-demand fetches; they
//! never expire.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use guild_core::ApiResult;

use crate::api::{GUILD_PAGE_LIMIT, GuildApi, MEMBER_PAGE_LIMIT};
use crate::codec::{make_group_id, namespace_user};
use crate::model::api::{Channel, Guild, Member};

// ============================================================================
// Entries
// ============================================================================

/// Last known profile of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendEntry {
    /// Namespaced user id.
    pub user_id: String,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
    /// Direct message session guild.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    /// Direct message session channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// Guild the user was last seen in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_guild_id: Option<String>,
    /// Channel the user was last seen in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_channel_id: Option<String>,
}

impl FriendEntry {
    /// Creates an entry knowing only the user id.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Builds an entry from guild member info.
    pub fn from_member(member: &Member, guild_id: &str, id_prefix: &str) -> Option<Self> {
        let user = member.user.as_ref()?;
        Some(Self {
            user_id: namespace_user(id_prefix, &user.id),
            nickname: member.nick.clone().unwrap_or_else(|| user.username.clone()),
            avatar: user.avatar.clone(),
            bot: user.bot,
            source_guild_id: Some(guild_id.to_string()),
            ..Default::default()
        })
    }

    /// Overlays `update` onto `self`. Empty strings and `None` keep the old value.
    pub fn merge(&mut self, update: FriendEntry) {
        if !update.nickname.is_empty() {
            self.nickname = update.nickname;
        }
        self.bot |= update.bot;
        merge_opt(&mut self.avatar, update.avatar);
        merge_opt(&mut self.guild_id, update.guild_id);
        merge_opt(&mut self.channel_id, update.channel_id);
        merge_opt(&mut self.source_guild_id, update.source_guild_id);
        merge_opt(&mut self.source_channel_id, update.source_channel_id);
    }
}

/// Metadata of a guild channel, keyed by `<guild>-<channel>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub group_id: String,
    /// `<guild name>-<channel name>`.
    pub group_name: String,
    pub guild_id: String,
    pub guild_name: String,
    pub channel_id: String,
    pub channel_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<i64>,
}

impl GroupEntry {
    /// Creates an entry knowing only the ids.
    pub fn new(guild_id: &str, channel_id: &str) -> Self {
        Self {
            group_id: make_group_id(guild_id, channel_id),
            guild_id: guild_id.to_string(),
            channel_id: channel_id.to_string(),
            ..Default::default()
        }
    }

    /// Builds an entry from a guild and one of its channels.
    pub fn from_parts(guild: &Guild, channel: &Channel) -> Self {
        Self {
            group_id: make_group_id(&guild.id, &channel.id),
            group_name: format!("{}-{}", guild.name, channel.name),
            guild_id: guild.id.clone(),
            guild_name: guild.name.clone(),
            channel_id: channel.id.clone(),
            channel_name: channel.name.clone(),
            owner_id: guild.owner_id.clone(),
            guild_icon: guild.icon.clone(),
            member_count: guild.member_count,
            channel_type: channel.kind,
        }
    }

    /// Overlays `update` onto `self`. Empty strings and `None` keep the old value.
    pub fn merge(&mut self, update: GroupEntry) {
        merge_str(&mut self.group_name, update.group_name);
        merge_str(&mut self.guild_name, update.guild_name);
        merge_str(&mut self.channel_name, update.channel_name);
        merge_opt(&mut self.owner_id, update.owner_id);
        merge_opt(&mut self.guild_icon, update.guild_icon);
        merge_opt(&mut self.member_count, update.member_count);
        merge_opt(&mut self.channel_type, update.channel_type);
    }
}

fn merge_opt<T>(slot: &mut Option<T>, update: Option<T>) {
    if update.is_some() {
        *slot = update;
    }
}

fn merge_str(slot: &mut String, update: String) {
    if !update.is_empty() {
        *slot = update;
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Friend and group caches of one account.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    friends: RwLock<HashMap<String, FriendEntry>>,
    groups: RwLock<HashMap<String, GroupEntry>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or merges a friend entry and returns the stored value.
    pub fn upsert_friend(&self, entry: FriendEntry) -> FriendEntry {
        let mut friends = self.friends.write();
        match friends.get_mut(&entry.user_id) {
            Some(existing) => {
                existing.merge(entry);
                existing.clone()
            }
            None => {
                friends.insert(entry.user_id.clone(), entry.clone());
                entry
            }
        }
    }

    /// Inserts or merges a group entry and returns the stored value.
    pub fn upsert_group(&self, entry: GroupEntry) -> GroupEntry {
        let mut groups = self.groups.write();
        match groups.get_mut(&entry.group_id) {
            Some(existing) => {
                existing.merge(entry);
                existing.clone()
            }
            None => {
                groups.insert(entry.group_id.clone(), entry.clone());
                entry
            }
        }
    }

    pub fn lookup_friend(&self, user_id: &str) -> Option<FriendEntry> {
        self.friends.read().get(user_id).cloned()
    }

    pub fn lookup_group(&self, group_id: &str) -> Option<GroupEntry> {
        self.groups.read().get(group_id).cloned()
    }

    /// Replaces the whole group map.
    pub fn replace_groups(&self, entries: impl IntoIterator<Item = GroupEntry>) {
        let map = entries
            .into_iter()
            .map(|entry| (entry.group_id.clone(), entry))
            .collect();
        *self.groups.write() = map;
    }

    /// Returns a snapshot of the group map.
    pub fn groups(&self) -> HashMap<String, GroupEntry> {
        self.groups.read().clone()
    }

    pub fn friend_count(&self) -> usize {
        self.friends.read().len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.read().len()
    }

    /// Lists every channel of every guild and replaces the group map.
    pub async fn fetch_group_list(&self, api: &dyn GuildApi) -> ApiResult<Vec<GroupEntry>> {
        let groups = fetch_group_array(api).await?;
        self.replace_groups(groups.iter().cloned());
        debug!(groups = groups.len(), "Refreshed group list");
        Ok(groups)
    }

    /// Pages through the members of `guild_id` and upserts each as a friend.
    pub async fn fetch_member_list(
        &self,
        api: &dyn GuildApi,
        guild_id: &str,
        id_prefix: &str,
    ) -> ApiResult<Vec<FriendEntry>> {
        let mut entries = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let page = api
                .guild_members(guild_id, after.as_deref(), MEMBER_PAGE_LIMIT)
                .await?;
            let last = page
                .last()
                .and_then(|m| m.user.as_ref())
                .map(|u| u.id.clone());
            let full_page = page.len() >= MEMBER_PAGE_LIMIT as usize;
            entries.extend(
                page.iter()
                    .filter_map(|m| FriendEntry::from_member(m, guild_id, id_prefix))
                    .map(|entry| self.upsert_friend(entry)),
            );
            if !full_page || last.is_none() || last == after {
                break;
            }
            after = last;
        }
        debug!(guild_id, members = entries.len(), "Refreshed member list");
        Ok(entries)
    }
}

/// Lists every channel of every guild the account joined.
///
/// A guild whose channels cannot be listed is logged and skipped.
pub async fn fetch_group_array(api: &dyn GuildApi) -> ApiResult<Vec<GroupEntry>> {
    let mut groups = Vec::new();
    for guild in fetch_guilds(api).await? {
        match api.channels(&guild.id).await {
            Ok(channels) => {
                groups.extend(channels.iter().map(|c| GroupEntry::from_parts(&guild, c)));
            }
            Err(e) => {
                error!(guild_id = %guild.id, error = %e, "Failed to list guild channels");
            }
        }
    }
    Ok(groups)
}

async fn fetch_guilds(api: &dyn GuildApi) -> ApiResult<Vec<Guild>> {
    let mut guilds: Vec<Guild> = Vec::new();
    let mut after: Option<String> = None;
    loop {
        let page = api.me_guilds(after.as_deref(), GUILD_PAGE_LIMIT).await?;
        let full_page = page.len() >= GUILD_PAGE_LIMIT as usize;
        let last = page.last().map(|g| g.id.clone());
        guilds.extend(page);
        if !full_page || last.is_none() || last == after {
            break;
        }
        after = last;
    }
    Ok(guilds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockApi;

    fn friend() -> FriendEntry {
        FriendEntry {
            user_id: "1".into(),
            nickname: "alice".into(),
            avatar: Some("https://a".into()),
            source_guild_id: Some("g".into()),
            source_channel_id: Some("c".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let registry = EntityRegistry::new();
        registry.upsert_friend(friend());
        registry.upsert_friend(friend());
        assert_eq!(registry.friend_count(), 1);
        assert_eq!(registry.lookup_friend("1"), Some(friend()));
    }

    #[test]
    fn test_upsert_merges_fields() {
        let registry = EntityRegistry::new();
        registry.upsert_friend(friend());
        let merged = registry.upsert_friend(FriendEntry {
            user_id: "1".into(),
            nickname: "alice2".into(),
            guild_id: Some("dm-g".into()),
            ..Default::default()
        });
        assert_eq!(merged.nickname, "alice2");
        assert_eq!(merged.avatar.as_deref(), Some("https://a"));
        assert_eq!(merged.source_guild_id.as_deref(), Some("g"));
        assert_eq!(merged.guild_id.as_deref(), Some("dm-g"));
    }

    #[test]
    fn test_group_upsert_and_replace() {
        let registry = EntityRegistry::new();
        registry.upsert_group(GroupEntry::new("g", "c"));
        let merged = registry.upsert_group(GroupEntry {
            group_name: "G-C".into(),
            ..GroupEntry::new("g", "c")
        });
        assert_eq!(merged.group_name, "G-C");
        assert_eq!(registry.group_count(), 1);

        registry.replace_groups(vec![GroupEntry::new("x", "y")]);
        assert!(registry.lookup_group("g-c").is_none());
        assert!(registry.lookup_group("x-y").is_some());
    }

    #[tokio::test]
    async fn test_fetch_group_list_skips_failing_guild() {
        let api = MockApi::default()
            .with_guild("g1", "Guild One", &[("c1", "general"), ("c2", "talk")])
            .with_guild("g2", "Broken", &[])
            .with_guild("g3", "Guild Three", &[("c3", "main")])
            .failing_channels("g2");
        let registry = EntityRegistry::new();
        let groups = registry.fetch_group_list(&api).await.unwrap();

        let ids: Vec<_> = groups.iter().map(|g| g.group_id.as_str()).collect();
        assert_eq!(ids, vec!["g1-c1", "g1-c2", "g3-c3"]);
        let entry = registry.lookup_group("g1-c2").unwrap();
        assert_eq!(entry.group_name, "Guild One-talk");
    }

    #[tokio::test]
    async fn test_fetch_member_list_records_source_guild() {
        let api = MockApi::default().with_member("g1", "u1", "bob", Some("Bobby"));
        let registry = EntityRegistry::new();
        let members = registry
            .fetch_member_list(&api, "g1", "qg_")
            .await
            .unwrap();

        assert_eq!(members.len(), 1);
        let entry = registry.lookup_friend("qg_u1").unwrap();
        assert_eq!(entry.nickname, "Bobby");
        assert_eq!(entry.source_guild_id.as_deref(), Some("g1"));
    }
}
