pub mod approval;
pub mod customer;
pub mod event;
pub mod job;
pub mod line_item;
pub mod media;
pub mod principal;
