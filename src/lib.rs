// Shared core for the news-source authorship verification pipeline.
// The stage binaries (parse_news, filter_news, make_batch_jsonl,
// call_batch_api, run_local, check_output) are thin CLIs over these modules.

pub mod corpus;
pub mod pairs;
pub mod prompts;
pub mod scoring;
