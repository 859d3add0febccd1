mod classify_tests;
mod text_clean_tests;
