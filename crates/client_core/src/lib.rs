pub mod client;
pub mod editor;
pub mod image;

pub use client::{ClientError, RacingClient};
pub use editor::{CommitOutcome, EditorMode, EntityEditorStore, IdAllocator};
pub use image::{image_data_url, load_image_data_url, ImageError};
