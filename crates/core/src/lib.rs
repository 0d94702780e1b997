pub mod annotation {
    pub mod domain {
        pub mod frame_annotator;
        pub mod palette;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod class_names;
        pub mod device;
        pub mod object_detector;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod pipeline_driver;
    pub mod pipeline_logger;
    pub mod process_video_use_case;
}

pub mod shared {
    pub mod constants;
    pub mod detection;
    pub mod error;
    pub mod frame;
    pub mod video_metadata;
}

pub mod video {
    pub mod domain {
        pub mod video_reader;
        pub mod video_writer;
    }
    pub mod infrastructure;
}

pub use pipeline::process_video_use_case::{process_video, ProcessVideoConfig, ProcessVideoUseCase};
pub use shared::error::{ErrorKind, PipelineError};
