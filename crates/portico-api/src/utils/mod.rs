pub mod cookies;
pub mod ip_extraction;
