pub mod shared {
    pub mod cancel_token;
    pub mod constants;
    pub mod embedding;
    pub mod error;
    pub mod frame;
    pub mod settings;
}

pub mod recognition {
    pub mod domain {
        pub mod cache_table;
        pub mod embedding_provider;
        pub mod identity_cache;
        pub mod match_engine;
        pub mod roster_source;
    }
    pub mod infrastructure;
}

pub mod capture {
    pub mod domain {
        pub mod camera_manager;
        pub mod capture_device;
        pub mod fallback_frames;
    }
    pub mod infrastructure;
}

pub mod alerting {
    pub mod domain {
        pub mod dedup_tracker;
        pub mod detection_event;
        pub mod detection_key;
        pub mod event_dispatcher;
        pub mod event_sink;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod infrastructure;
    pub mod session_controller;
    pub mod session_executor;
    pub mod surveillance_loop;
}
