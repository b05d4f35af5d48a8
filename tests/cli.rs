// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn lists_the_palettes() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("wallbrot")?
        .arg("--list-palettes")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fire_Ice"))
        .stdout(predicate::str::contains("Cosmic_Nebula"));
    Ok(())
}

#[test]
fn lists_regions_for_a_power() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("wallbrot")?
        .args(&["--list-regions", "--power", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Petal"));

    Command::cargo_bin("wallbrot")?
        .args(&["--list-regions", "--power", "2.5+0.7i"])
        .assert()
        .success()
        .stdout(predicate::str::contains("discovered"));
    Ok(())
}

#[test]
fn rejects_a_malformed_power() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("wallbrot")?
        .args(&["--power", "two"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not parse power"));
    Ok(())
}

#[test]
fn unknown_palette_fails_before_rendering() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    Command::cargo_bin("wallbrot")?
        .arg("--output")
        .arg(dir.path())
        .args(&["--palette", "Mauve_Dreams", "--seed", "7", "--preview"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Mauve_Dreams"));
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn anti_grain_blend_must_be_a_fraction() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("wallbrot")?
        .args(&["--anti-grain", "1.5", "--list-palettes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 0 and 1"));

    Command::cargo_bin("wallbrot")?
        .args(&["--anti-grain", "soft", "--list-palettes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not parse anti-grain blend"));

    Command::cargo_bin("wallbrot")?
        .args(&["--anti-grain", "0.45", "--color-wave", "--list-palettes"])
        .assert()
        .success();
    Ok(())
}

#[test]
fn preview_run_writes_a_full_set() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    Command::cargo_bin("wallbrot")?
        .arg("--output")
        .arg(dir.path())
        .args(&["--power", "2", "--seed", "7", "--preview", "--count", "1", "--attempts", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fractal:"));

    for name in &[
        "wallbrot_1_scan.png",
        "wallbrot_1_desktop.png",
        "wallbrot_1_mobile.png",
        "wallbrot_1.txt",
    ] {
        assert!(dir.path().join(name).is_file(), "missing {}", name);
    }
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 4);

    let metadata = std::fs::read_to_string(dir.path().join("wallbrot_1.txt"))?;
    assert!(metadata.contains("crop desktop:"));
    assert!(metadata.contains("crop mobile:"));
    Ok(())
}
