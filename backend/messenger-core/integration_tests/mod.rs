mod bridge;
mod helpers;
mod ws;
