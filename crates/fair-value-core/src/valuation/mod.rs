pub mod dcf;
pub mod forecast;

#[cfg(feature = "reverse")]
pub mod reverse;
