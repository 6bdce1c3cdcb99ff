mod file_key_value_store_test;
