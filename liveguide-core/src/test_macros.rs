macro_rules! config {
    () => {
        $crate::config::Config {
            server: $crate::config::ServerConfig {
                base_url: "http://localhost:8096".parse().unwrap(),
                user_id: "user".to_string(),
                access_token: None,
                timeout: std::time::Duration::from_secs(30),
                image_max_width: 80,
            },
            guide: Default::default(),
            layout: Default::default(),
        }
    };
}

macro_rules! channel {
    ($id:expr, $name:expr) => {
        $crate::models::Channel {
            id: $id.into(),
            name: $name.to_string(),
            number: None,
            artwork: None,
        }
    };
}

macro_rules! program {
    ($id:expr, $channel_id:expr, $start_at:expr, $duration:literal) => {
        $crate::models::Program {
            id: $id.into(),
            channel_id: $channel_id.into(),
            title: $id.to_string(),
            start_at: $start_at,
            end_at: $start_at
                + chrono::Duration::from_std(humantime::parse_duration($duration).unwrap())
                    .unwrap(),
            artwork: None,
        }
    };
}
