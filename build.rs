/// Build script for voicescroll
///
/// Only does work when the Linux `vosk` speech backend is enabled:
/// - Sets RPATH to $ORIGIN so the binary finds libvosk.so in the same directory
/// - Honors VOSK_LIB_PATH as an extra library search path

fn main() {
    println!("cargo:rerun-if-env-changed=VOSK_LIB_PATH");

    #[cfg(target_os = "linux")]
    if std::env::var_os("CARGO_FEATURE_VOSK").is_some() {
        // Look for libvosk.so next to the binary so it can be shipped alongside
        println!("cargo:rustc-link-arg=-Wl,-rpath,$ORIGIN");

        if let Ok(vosk_path) = std::env::var("VOSK_LIB_PATH") {
            println!("cargo:rustc-link-search=native={}", vosk_path);
        }
    }
}
