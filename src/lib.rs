pub mod feed;
pub mod load;
