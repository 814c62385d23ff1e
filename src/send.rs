//! The send half: walking a value graph into a stream of frames.

mod serializer;

pub use serializer::ObjectSerializer;

#[cfg(test)]
mod test;
