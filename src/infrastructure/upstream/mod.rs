mod http_answer_generator;
mod scaffold_answer_generator;
mod upstream_decoder;

pub use http_answer_generator::HttpAnswerGenerator;
pub use scaffold_answer_generator::ScaffoldAnswerGenerator;
pub use upstream_decoder::UpstreamDecoder;
