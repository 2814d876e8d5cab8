//! Built-in system patterns.

/// System patterns applied to every root unless individually disabled.
pub const DEFAULT_SYSTEM_PATTERNS: &[&str] = &[
    // Version control
    "**/.git/",
    "**/.svn/",
    "**/.hg/",
    // Dependencies
    "**/node_modules/",
    "**/bower_components/",
    "**/vendor/",
    "**/.venv/",
    "**/venv/",
    "**/__pycache__/",
    // Build output
    "**/dist/",
    "**/build/",
    "**/out/",
    "**/target/",
    "**/.next/",
    "**/.nuxt/",
    "**/coverage/",
    "**/.cache/",
    // Compiled and generated
    "**/*.pyc",
    "**/*.pyo",
    "**/*.class",
    "**/*.o",
    "**/*.min.js",
    "**/*.min.css",
    "**/*.map",
    // Lock files
    "**/package-lock.json",
    "**/yarn.lock",
    "**/pnpm-lock.yaml",
    "**/Cargo.lock",
    "**/poetry.lock",
    "**/composer.lock",
    "**/Gemfile.lock",
    // Secrets
    "**/.env",
    "**/.env.*",
    // Editor and OS noise
    "**/*.swp",
    "**/*.tmp",
    "**/.DS_Store",
    "**/Thumbs.db",
    "**/*.log",
];
