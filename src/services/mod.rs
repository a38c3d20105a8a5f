pub mod gallery_service;
pub mod local_store;
pub mod object_store;
