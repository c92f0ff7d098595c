pub mod domain;
pub mod embedding_index;
pub mod identity_store;
pub mod recognizer;
