//! Anti-automation-detection patches.
//!
//! Registered with `Page.addScriptToEvaluateOnNewDocument` so they run before
//! any site script on every navigation.

/// Chrome flags applied to every launched browser.
pub const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
    "--no-sandbox",
    "--disable-gpu",
    "--window-size=1920,1080",
];

/// Scripts evaluated in each new document.
pub const STEALTH_SCRIPTS: &[&str] = &[
    // navigator.webdriver is the first thing bot walls check
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    r#"
    window.chrome = window.chrome || {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['es-PE', 'es', 'en'],
        configurable: true
    });
    "#,
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' }
        ],
        configurable: true
    });
    "#,
    r#"
    if (window.navigator.permissions) {
        const originalQuery = window.navigator.permissions.query;
        window.navigator.permissions.query = (parameters) => (
            parameters.name === 'notifications' ?
            Promise.resolve({ state: Notification.permission }) :
            originalQuery(parameters)
        );
    }
    "#,
];
