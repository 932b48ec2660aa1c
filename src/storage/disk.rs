pub mod page_manager;

pub use page_manager::{PageData, PageManager, PAGE_SIZE};
