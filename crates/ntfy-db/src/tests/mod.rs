use uuid::Uuid;

use crate::{Database, NewTopic, StoredTopic};

fn test_db() -> Database {
    Database::open_in_memory().expect("Failed to create test DB")
}

fn add_topic(db: &Database, name: &str) -> StoredTopic {
    db.insert_topic(&NewTopic {
        id: Uuid::new_v4(),
        name,
        display_name: None,
        server_url: "https://ntfy.sh",
        username: None,
        is_managed: false,
    })
    .unwrap()
}
