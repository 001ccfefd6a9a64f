use crate::builders::{Delete, Insert, Select, Update};
use crate::platform::Platform;

/// Builder factory.
/// Obtained from an adapter and used to start dialect-specific statements.
#[derive(Debug, Clone, Copy)]
pub struct Factory {
    platform: Platform,
}

impl Factory {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Start building a SELECT query.
    pub fn select<I, S>(&self, columns: I) -> Select
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Select::new(self.platform).columns(columns)
    }

    pub fn insert(&self, table: impl Into<String>) -> Insert {
        Insert::new(self.platform, table)
    }

    pub fn update(&self, table: impl Into<String>) -> Update {
        Update::new(self.platform, table)
    }

    pub fn delete(&self, table: impl Into<String>) -> Delete {
        Delete::new(self.platform, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Driver;

    #[test]
    fn test_factory_builders_share_the_dialect() {
        let factory = Factory::new(Platform::new(Driver::MssqlPdo));
        assert_eq!(
            factory.select(["id"]).from("user").to_sql().unwrap(),
            "SELECT [id] FROM [user]"
        );
        assert_eq!(
            factory.delete("user").where_("id", 1).to_sql().unwrap(),
            "DELETE FROM [user] WHERE [id] = 1"
        );
        assert_eq!(
            factory.update("user").set("a", 1).to_sql().unwrap(),
            "UPDATE [user] SET [a] = 1"
        );
        assert_eq!(
            factory.insert("user").set("a", 1).to_sql().unwrap(),
            "INSERT INTO [user] ([a]) VALUES (1)"
        );
    }
}
