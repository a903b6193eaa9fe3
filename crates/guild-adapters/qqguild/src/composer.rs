//! Outbound composer.
//!
//! Turns a segment list into the ordered sequence of message posts:
//!
//! - text, mentions and emoji accumulate into one pending `content`
//! - `reply` sets the pending reference (`msg_id`), last one wins
//! - an image is posted immediately, carrying the content pending before it;
//!   inline image data that does not decode is sent as its text form instead
//! - a `node` flushes pending content, then sends each nested message
//! - whatever content is left at the end goes out in one final post
//!
//! Posts are awaited one after another; the first failure aborts the send.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::info;

use guild_core::{ApiResult, Message};

use crate::api::GuildApi;
use crate::codec::{self, Fragment};
use crate::model::api::{MessageBody, SentMessage};
use crate::model::segment::Segment;

/// Destination of the posts produced by the composer.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Posts one message.
    async fn post(&self, body: MessageBody) -> ApiResult<SentMessage>;
}

/// Per-send state shared by nested sends.
#[derive(Debug, Clone, Default)]
pub struct SendContext {
    /// Message being replied to.
    pub reference: Option<String>,
    /// Namespace prefix stripped from mention targets.
    pub id_prefix: String,
}

impl SendContext {
    /// Creates a context replying to `reference`.
    pub fn new(reference: Option<String>, id_prefix: impl Into<String>) -> Self {
        Self {
            reference,
            id_prefix: id_prefix.into(),
        }
    }
}

/// Outcome of one send.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendResult {
    /// Every post response, in order.
    pub records: Vec<SentMessage>,
    /// Ids of the created messages, in order.
    pub message_ids: Vec<String>,
}

impl SendResult {
    fn record(&mut self, sent: SentMessage) {
        if let Some(id) = &sent.id {
            self.message_ids.push(id.clone());
        }
        self.records.push(sent);
    }

    fn merge(&mut self, other: SendResult) {
        self.records.extend(other.records);
        self.message_ids.extend(other.message_ids);
    }

    /// Returns the id of the last created message.
    pub fn last_id(&self) -> Option<&str> {
        self.message_ids.last().map(String::as_str)
    }
}

fn take_content(pending: &mut String) -> Option<String> {
    (!pending.is_empty()).then(|| std::mem::take(pending))
}

async fn flush(
    sink: &dyn MessageSink,
    ctx: &SendContext,
    pending: &mut String,
    result: &mut SendResult,
) -> ApiResult<()> {
    if let Some(content) = take_content(pending) {
        let body = MessageBody {
            content: Some(content),
            msg_id: ctx.reference.clone(),
            ..Default::default()
        };
        result.record(sink.post(body).await?);
    }
    Ok(())
}

/// Sends `segments` through `sink`.
pub fn send<'a>(
    sink: &'a dyn MessageSink,
    ctx: &'a mut SendContext,
    segments: &'a [Segment],
) -> BoxFuture<'a, ApiResult<SendResult>> {
    async move {
        let mut result = SendResult::default();
        let mut pending = String::new();

        for segment in segments {
            match codec::encode(segment, &ctx.id_prefix) {
                Fragment::Content(wire) => pending.push_str(&wire),
                Fragment::Reference(id) => ctx.reference = Some(id.to_string()),
                Fragment::Image(source) => {
                    let Some(mut body) = codec::image_body(source).await? else {
                        pending.push_str(&codec::escape_content(&segment.to_string()));
                        continue;
                    };
                    body.content = take_content(&mut pending);
                    body.msg_id = ctx.reference.clone();
                    result.record(sink.post(body).await?);
                }
                Fragment::Forward(nodes) => {
                    flush(sink, ctx, &mut pending, &mut result).await?;
                    for node in nodes {
                        let nested = send(sink, &mut *ctx, node.message.segments()).await?;
                        result.merge(nested);
                    }
                }
                Fragment::Skip => {}
            }
        }

        flush(sink, ctx, &mut pending, &mut result).await?;
        Ok(result)
    }
    .boxed()
}

// ============================================================================
// Sinks
// ============================================================================

/// Posts into a guild channel.
pub struct ChannelSink<'a> {
    pub api: &'a dyn GuildApi,
    pub bot_id: &'a str,
    pub channel_id: &'a str,
}

#[async_trait]
impl MessageSink for ChannelSink<'_> {
    async fn post(&self, body: MessageBody) -> ApiResult<SentMessage> {
        info!(
            bot_id = %self.bot_id,
            channel_id = %self.channel_id,
            body = %body.summary(),
            "Sending group message"
        );
        self.api.post_message(self.channel_id, body).await
    }
}

/// Posts into a direct message session.
pub struct DirectSink<'a> {
    pub api: &'a dyn GuildApi,
    pub bot_id: &'a str,
    pub guild_id: &'a str,
    pub user_id: &'a str,
}

#[async_trait]
impl MessageSink for DirectSink<'_> {
    async fn post(&self, body: MessageBody) -> ApiResult<SentMessage> {
        info!(
            bot_id = %self.bot_id,
            guild_id = %self.guild_id,
            user_id = %self.user_id,
            body = %body.summary(),
            "Sending friend message"
        );
        self.api.post_direct_message(self.guild_id, body).await
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use guild_core::ApiError;

    use super::*;
    use crate::model::message::OutboundMessage;
    use crate::model::segment::ForwardNode;

    /// Records every post and answers with sequential ids.
    #[derive(Default)]
    struct RecordingSink {
        posts: Mutex<Vec<MessageBody>>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn post(&self, body: MessageBody) -> ApiResult<SentMessage> {
            let mut posts = self.posts.lock();
            if self.fail_at == Some(posts.len()) {
                return Err(ApiError::Other("boom".into()));
            }
            posts.push(body);
            Ok(SentMessage::with_id(format!("id{}", posts.len())))
        }
    }

    impl RecordingSink {
        fn posts(&self) -> Vec<MessageBody> {
            self.posts.lock().clone()
        }
    }

    async fn run(sink: &RecordingSink, segments: &[Segment]) -> ApiResult<SendResult> {
        let mut ctx = SendContext::default();
        send(sink, &mut ctx, segments).await
    }

    #[tokio::test]
    async fn test_text_is_batched() {
        let sink = RecordingSink::default();
        let result = run(
            &sink,
            &[Segment::text("a"), Segment::at("1"), Segment::face("2"), Segment::text("<b>")],
        )
        .await
        .unwrap();

        let posts = sink.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content.as_deref(), Some("a<@1><emoji:2>&lt;b&gt;"));
        assert_eq!(result.message_ids, vec!["id1"]);
    }

    #[tokio::test]
    async fn test_image_between_text_is_two_posts() {
        let sink = RecordingSink::default();
        let result = run(
            &sink,
            &[Segment::text("before"), Segment::image("https://x/i.png"), Segment::text("after")],
        )
        .await
        .unwrap();

        let posts = sink.posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].content.as_deref(), Some("before"));
        assert_eq!(posts[0].image.as_deref(), Some("https://x/i.png"));
        assert_eq!(posts[1].content.as_deref(), Some("after"));
        assert!(posts[1].image.is_none());
        assert_eq!(result.records.len(), 2);
    }

    #[tokio::test]
    async fn test_leading_image_then_text_is_two_posts() {
        let sink = RecordingSink::default();
        run(&sink, &[Segment::image("base64://iVBORw0KGgo="), Segment::text("after")])
            .await
            .unwrap();

        let posts = sink.posts();
        assert_eq!(posts.len(), 2);
        assert!(posts[0].content.is_none());
        assert!(posts[0].is_multipart());
        assert_eq!(posts[1].content.as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn test_reply_last_one_wins() {
        let sink = RecordingSink::default();
        run(
            &sink,
            &[
                Segment::reply("r1"),
                Segment::text("x"),
                Segment::reply("r2"),
                Segment::text("y"),
            ],
        )
        .await
        .unwrap();

        let posts = sink.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content.as_deref(), Some("xy"));
        assert_eq!(posts[0].msg_id.as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_reply_alone_sends_nothing() {
        let sink = RecordingSink::default();
        let result = run(&sink, &[Segment::reply("r1"), Segment::Button(serde_json::json!({}))])
            .await
            .unwrap();
        assert!(sink.posts().is_empty());
        assert_eq!(result, SendResult::default());
    }

    #[tokio::test]
    async fn test_context_reference_applies_to_image() {
        let sink = RecordingSink::default();
        let mut ctx = SendContext::new(Some("event-msg".into()), "");
        send(&sink, &mut ctx, &[Segment::image("https://x/i.png")])
            .await
            .unwrap();
        assert_eq!(sink.posts()[0].msg_id.as_deref(), Some("event-msg"));
    }

    #[tokio::test]
    async fn test_mention_prefix_is_stripped() {
        let sink = RecordingSink::default();
        let mut ctx = SendContext::new(None, "qg_");
        send(&sink, &mut ctx, &[Segment::at("qg_5"), Segment::at_all()])
            .await
            .unwrap();
        assert_eq!(sink.posts()[0].content.as_deref(), Some("<@5>@everyone"));
    }

    #[tokio::test]
    async fn test_node_merges_each_nested_send() {
        let nodes = vec![
            ForwardNode::new("one"),
            ForwardNode::new(OutboundMessage::from(vec![
                Segment::text("two"),
                Segment::image("https://x/i.png"),
                Segment::text("three"),
            ])),
            ForwardNode::new(OutboundMessage::from(vec![
                Segment::image("https://x/a.png"),
                Segment::image("https://x/b.png"),
                Segment::text("four"),
            ])),
            ForwardNode::new(Segment::reply("r")),
        ];

        let mut per_node = Vec::new();
        for node in &nodes {
            let alone = run(&RecordingSink::default(), node.message.segments())
                .await
                .unwrap();
            per_node.push(alone.message_ids.len());
        }
        assert_eq!(per_node, vec![1, 2, 3, 0]);

        let sink = RecordingSink::default();
        let result = run(&sink, &[Segment::node(nodes)]).await.unwrap();
        assert_eq!(result.message_ids.len(), per_node.iter().sum::<usize>());

        let contents: Vec<_> = sink
            .posts()
            .into_iter()
            .map(|p| p.content.unwrap_or_default())
            .collect();
        assert_eq!(contents, vec!["one", "two", "three", "", "", "four"]);
    }

    #[tokio::test]
    async fn test_node_flushes_surrounding_text() {
        let sink = RecordingSink::default();
        let result = run(
            &sink,
            &[
                Segment::text("head"),
                Segment::node(vec![ForwardNode::new("inner")]),
                Segment::text("tail"),
            ],
        )
        .await
        .unwrap();
        assert_eq!(result.message_ids, vec!["id1", "id2", "id3"]);
        assert_eq!(sink.posts()[1].content.as_deref(), Some("inner"));
    }

    #[tokio::test]
    async fn test_undecodable_image_is_sent_as_text() {
        let sink = RecordingSink::default();
        let result = run(
            &sink,
            &[
                Segment::text("before"),
                Segment::image("base64://@@not base64@@"),
                Segment::text("after"),
            ],
        )
        .await
        .unwrap();

        let posts = sink.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content.as_deref(), Some("before[图片：base64://...]after"));
        assert!(!posts[0].is_multipart());
        assert_eq!(result.message_ids, vec!["id1"]);
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_posts() {
        let sink = RecordingSink {
            fail_at: Some(1),
            ..Default::default()
        };
        let err = run(
            &sink,
            &[Segment::image("https://x/1.png"), Segment::image("https://x/2.png"), Segment::text("z")],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::Other(_)));
        assert_eq!(sink.posts().len(), 1);
    }
}
