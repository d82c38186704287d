//! Database repositories.
//!
//! Each repository implements the matching trait from [`crate::store`].

mod actor;
mod domain_block;
mod favourite;
mod follow;
mod mute;
mod notification;
mod status;
mod timeline;

pub use actor::ActorRepository;
pub use domain_block::DomainBlockRepository;
pub use favourite::FavouriteRepository;
pub use follow::FollowRepository;
pub use mute::MuteRepository;
pub use notification::NotificationRepository;
pub use status::StatusRepository;
pub use timeline::TimelineRepository;

use sea_orm::{DbErr, SqlErr};
use vitrine_common::AppError;

pub(crate) fn db_err(e: DbErr) -> AppError {
    AppError::Database(e.to_string())
}

/// Whether an insert lost a race against a row with the same unique key.
pub(crate) fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
