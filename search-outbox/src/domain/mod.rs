mod batch;
mod operation;
mod work_item;

pub use batch::*;
pub use operation::*;
pub use work_item::*;
