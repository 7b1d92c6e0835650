pub mod http_embedding_provider;
pub mod http_roster_source;
