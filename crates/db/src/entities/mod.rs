//! Database entities.

pub mod actor;
pub mod domain_block;
pub mod favourite;
pub mod follow;
pub mod mute;
pub mod notification;
pub mod status;
pub mod status_attachment;
pub mod status_tag;
pub mod timeline_entry;

pub use actor::Entity as Actor;
pub use domain_block::Entity as DomainBlock;
pub use favourite::Entity as Favourite;
pub use follow::Entity as Follow;
pub use mute::Entity as Mute;
pub use notification::Entity as Notification;
pub use status::Entity as Status;
pub use status_attachment::Entity as StatusAttachment;
pub use status_tag::Entity as StatusTag;
pub use timeline_entry::Entity as TimelineEntry;
