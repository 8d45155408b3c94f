pub mod hit;
pub mod scene;
pub mod wire;

pub use hit::{GroupPart, Hit, NodePart, hit_test, input_port_at};
pub use scene::{PendingWire, RenderItem, RenderList, build_render_list};
