mod error;
mod logger;
mod session;
