//! Wire and canonical data model.

pub mod api;
pub mod event;
pub mod gateway;
pub mod message;
pub mod segment;

pub use api::{Channel, DmsSession, FileImage, Guild, Member, MessageBody, SentMessage, User};
pub use event::{
    Attachment, ConnectEvent, MessageEvent, MessagePayload, MessageReference, PayloadMember,
};
pub use gateway::{DispatchKind, Payload};
pub use message::{CanonicalMessage, MessageType, OutboundMessage, Sender};
pub use segment::{
    AtData, AttachmentData, AttachmentKind, FaceData, ForwardNode, ImageData, ReplyData, Segment,
    TextData,
};
