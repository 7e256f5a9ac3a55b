pub mod codec;
pub mod configs;
pub mod history;
pub mod layout;
