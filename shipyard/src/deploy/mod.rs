pub mod build;
pub mod fsm;
pub mod reporter;
pub mod service;
