mod discovery_test;
mod migration_test;
