mod openai_client;
mod reduce;
