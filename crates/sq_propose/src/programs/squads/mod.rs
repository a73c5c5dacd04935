pub mod error;
pub mod instructions;
pub mod message;
pub mod pda;
pub mod v4;
