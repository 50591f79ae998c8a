pub mod audit;
pub mod canvas;
pub mod lock;
pub mod message;
pub mod palette;
pub mod pixel;

pub use audit::AuditEntry;
pub use canvas::{hash_bitmap, parse_hex_color, Canvas, ERASER_COLOR};
pub use lock::RegionLock;
pub use message::{AppliedPixel, InboundMessage, OutboundMessage, PixelBulkUpdateData, PixelUpdateData};
pub use palette::Palette;
pub use pixel::{PixelEdit, Tool};
