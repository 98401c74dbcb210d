pub mod conversation;
pub mod landing;
