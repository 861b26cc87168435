mod dispatch;
mod lifecycle;
