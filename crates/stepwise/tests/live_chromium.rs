//! Live run against the real site.
//!
//! Needs Chromium, network access and `STEPIK_LOGIN` / `STEPIK_PASSWORD`:
//!
//! ```bash
//! cargo test -p stepwise --features browser --test live_chromium -- --ignored
//! ```

#![cfg(feature = "browser")]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use stepwise::prelude::*;

#[tokio::test]
#[ignore = "requires chromium, network and credentials"]
async fn live_free_course_journey() {
    let credentials = Credentials::from_env().expect("credentials in environment");
    let driver = ChromiumDriver::launch(DriverConfig::default())
        .await
        .expect("chromium should launch");
    let journey = FreeCourseJourney::new("python", credentials).unwrap();

    let outcome = journey
        .run_scoped(driver, JourneyConfig::default())
        .await
        .unwrap();
    println!("{}", outcome.report.to_json().unwrap());
    assert!(outcome.is_success(), "{:?}", outcome.result);
}
