pub mod http_event_sink;
pub mod telegram_alert_channel;
