pub mod fold;
pub mod page;
