pub mod ffmpeg_reader;
pub mod ffmpeg_writer;
#[cfg(test)]
pub mod test_video;
