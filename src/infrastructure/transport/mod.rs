mod http_chat_transport;

pub use http_chat_transport::HttpChatTransport;
