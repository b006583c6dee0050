pub mod intercept;
pub mod key_inject;
