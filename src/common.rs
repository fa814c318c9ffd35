macro_rules! log_error {
    ($($tt:tt)*) => {
        {
            #[cfg(feature = "log")]
            log::error!(target: "warden", $($tt)*);
            #[cfg(not(feature = "log"))]
            eprintln!("warden: {}", format_args!($($tt)*));
        }
    };
}

pub(crate) use log_error;
