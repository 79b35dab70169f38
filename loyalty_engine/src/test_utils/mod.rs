mod prepare_env;

pub use prepare_env::new_test_db;
