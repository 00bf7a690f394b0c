//! Remote collaborators reached over HTTP.

pub mod image_service;
pub mod notification;

pub use image_service::ImageServiceClient;
pub use notification::NotificationClient;
