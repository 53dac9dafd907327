//! License hint detection.
//!
//! The rule is fixed and part of the determinism contract: the first of
//! `LICENSE`, `LICENSE.md`, `LICENSE.txt`, `COPYING` present at the scan
//! root is scanned for the first matching SPDX-style keyword, in file
//! order. Every bundled unit carries the same scan-root hint.

use camino::Utf8Path;

const LICENSE_FILES: &[&str] = &["LICENSE", "LICENSE.md", "LICENSE.txt", "COPYING"];

/// Keyword table scanned in file order; first match wins.
const LICENSE_KEYWORDS: &[(&str, &str)] = &[
    ("Apache License", "Apache-2.0"),
    ("Apache-2.0", "Apache-2.0"),
    ("MIT License", "MIT"),
    ("Permission is hereby granted, free of charge", "MIT"),
    ("BSD 3-Clause", "BSD-3-Clause"),
    ("BSD 2-Clause", "BSD-2-Clause"),
    ("GNU LESSER GENERAL PUBLIC LICENSE", "LGPL"),
    ("GNU GENERAL PUBLIC LICENSE", "GPL"),
    ("Version 3", "GPL-3.0"),
    ("Mozilla Public License", "MPL-2.0"),
    ("This is free and unencumbered software", "Unlicense"),
    ("ISC License", "ISC"),
];

/// Detect the scan root's license hint, or `"unknown"`.
#[must_use]
pub fn detect_license_hint(scan_root: &Utf8Path) -> String {
    for name in LICENSE_FILES {
        let path = scan_root.join(name);
        if !path.is_file() {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(path.as_std_path()) else {
            continue;
        };
        let mut gpl_seen = false;
        for line in content.lines() {
            for (keyword, hint) in LICENSE_KEYWORDS {
                if line.contains(keyword) {
                    // "Version 3" only disambiguates a GPL already seen
                    if *hint == "GPL-3.0" && !gpl_seen {
                        continue;
                    }
                    if *hint == "GPL" {
                        gpl_seen = true;
                        continue;
                    }
                    return (*hint).to_string();
                }
            }
        }
        if gpl_seen {
            return "GPL-2.0".to_string();
        }
        return "unknown".to_string();
    }
    "unknown".to_string()
}
