//! Fingerprint patch set.
//!
//! Each patch is a self-contained script registered to run before any
//! document script, so detection code never observes the unpatched
//! value. The set is declarative: the session applies every entry in
//! [`PATCHES`] once at setup and nothing pokes browser state afterwards.

/// Hide the automation flag and the chromedriver globals.
pub const WEBDRIVER_PATCH: &str = r#"
Object.defineProperty(navigator, 'webdriver', {
    get: () => false,
    configurable: true
});
for (const key of Object.keys(window)) {
    if (key.startsWith('cdc_')) {
        delete window[key];
    }
}
"#;

/// Consistent client-hint brands for a desktop Chrome.
pub const USER_AGENT_DATA_PATCH: &str = r#"
if (navigator.userAgentData) {
    Object.defineProperty(navigator.userAgentData, 'brands', {
        get: () => [
            {brand: 'Google Chrome', version: '120'},
            {brand: 'Chromium', version: '120'},
            {brand: 'Not=A?Brand', version: '24'}
        ],
        configurable: true
    });
    Object.defineProperty(navigator.userAgentData, 'mobile', {
        get: () => false,
        configurable: true
    });
    Object.defineProperty(navigator.userAgentData, 'platform', {
        get: () => 'macOS',
        configurable: true
    });
}
"#;

/// Headless Chrome ships without `window.chrome`; real Chrome always has
/// it, enum tables included.
pub const CHROME_RUNTIME_PATCH: &str = r#"
window.chrome = {
    app: {
        isInstalled: false,
        InstallState: {
            DISABLED: 'disabled',
            INSTALLED: 'installed',
            NOT_INSTALLED: 'not_installed'
        },
        RunningState: {
            CANNOT_RUN: 'cannot_run',
            READY_TO_RUN: 'ready_to_run',
            RUNNING: 'running'
        }
    },
    runtime: {
        OnInstalledReason: {
            CHROME_UPDATE: 'chrome_update',
            INSTALL: 'install',
            SHARED_MODULE_UPDATE: 'shared_module_update',
            UPDATE: 'update'
        },
        OnRestartRequiredReason: {
            APP_UPDATE: 'app_update',
            OS_UPDATE: 'os_update',
            PERIODIC: 'periodic'
        },
        PlatformArch: {
            ARM: 'arm',
            ARM64: 'arm64',
            MIPS: 'mips',
            MIPS64: 'mips64',
            X86_32: 'x86-32',
            X86_64: 'x86-64'
        },
        PlatformNaclArch: {
            ARM: 'arm',
            MIPS: 'mips',
            MIPS64: 'mips64',
            X86_32: 'x86-32',
            X86_64: 'x86-64'
        },
        PlatformOs: {
            ANDROID: 'android',
            CROS: 'cros',
            LINUX: 'linux',
            MAC: 'mac',
            OPENBSD: 'openbsd',
            WIN: 'win'
        },
        RequestUpdateCheckStatus: {
            NO_UPDATE: 'no_update',
            THROTTLED: 'throttled',
            UPDATE_AVAILABLE: 'update_available'
        }
    }
};
"#;

/// Notification permission queries answer like a real profile instead of
/// the headless 'denied'.
pub const PERMISSIONS_PATCH: &str = r#"
const originalQuery = window.navigator.permissions.query;
window.navigator.permissions.query = (parameters) => (
    parameters.name === 'notifications' ?
        Promise.resolve({state: Notification.permission, onchange: null}) :
        originalQuery(parameters)
);
"#;

pub const PLUGINS_PATCH: &str = r#"
Object.defineProperty(navigator, 'plugins', {
    get: () => {
        const plugins = [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: 'Portable Document Format' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ];
        const fakePlugins = {
            length: plugins.length,
            item: function(index) { return this[index]; },
            namedItem: function(name) {
                for (let i = 0; i < plugins.length; i++) {
                    if (plugins[i].name === name) return this[i];
                }
                return null;
            },
            refresh: function() {}
        };
        for (let i = 0; i < plugins.length; i++) {
            const plugin = plugins[i];
            fakePlugins[i] = {
                name: plugin.name,
                filename: plugin.filename,
                description: plugin.description,
                length: 1,
                item: function() { return this[0]; },
                namedItem: function() { return this[0]; },
                0: {
                    type: 'application/x-nacl',
                    suffixes: '',
                    description: plugin.description,
                    enabledPlugin: plugin
                }
            };
        }
        return fakePlugins;
    }
});
"#;

pub const LANGUAGES_PATCH: &str = r#"
Object.defineProperty(navigator, 'languages', {
    get: () => ['en-US', 'en'],
    configurable: true
});
"#;

/// Plausible mid-range hardware: 8 cores, 8 GB, a 4g connection.
pub const DEVICE_PROFILE_PATCH: &str = r#"
Object.defineProperty(navigator, 'connection', {
    get: () => ({
        effectiveType: '4g',
        rtt: 50,
        downlink: 10,
        saveData: false
    }),
    configurable: true
});
Object.defineProperty(navigator, 'deviceMemory', {
    get: () => 8,
    configurable: true
});
Object.defineProperty(navigator, 'hardwareConcurrency', {
    get: () => 8,
    configurable: true
});
"#;

pub const SCREEN_PATCH: &str = r#"
['width', 'height', 'availWidth', 'availHeight', 'colorDepth', 'pixelDepth'].forEach(prop => {
    Object.defineProperty(screen, prop, {
        get: () => {
            if (prop === 'width' || prop === 'availWidth') return 1920;
            if (prop === 'height' || prop === 'availHeight') return 1080;
            if (prop === 'colorDepth' || prop === 'pixelDepth') return 24;
            return undefined;
        },
        configurable: true
    });
});
"#;

/// UNMASKED_VENDOR_WEBGL (37445) and UNMASKED_RENDERER_WEBGL (37446)
/// answer as Apple hardware, matching the claimed platform.
pub const WEBGL_PATCH: &str = r#"
const getParameterProxyHandler = {
    apply: function(target, thisArg, args) {
        const param = args[0];
        if (param === 37445) return 'Apple Inc.';
        if (param === 37446) return 'Apple GPU';
        return Reflect.apply(target, thisArg, args);
    }
};
if (window.WebGLRenderingContext) {
    WebGLRenderingContext.prototype.getParameter =
        new Proxy(WebGLRenderingContext.prototype.getParameter, getParameterProxyHandler);
}
if (window.WebGL2RenderingContext) {
    WebGL2RenderingContext.prototype.getParameter =
        new Proxy(WebGL2RenderingContext.prototype.getParameter, getParameterProxyHandler);
}
"#;

/// Per-pixel noise on canvas readback defeats canvas hashing without
/// visibly changing the page.
pub const CANVAS_PATCH: &str = r#"
const origToDataURL = HTMLCanvasElement.prototype.toDataURL;
HTMLCanvasElement.prototype.toDataURL = function(type) {
    const canvas = this;
    const copy = document.createElement('canvas');
    copy.width = canvas.width;
    copy.height = canvas.height;
    const ctx = copy.getContext('2d');
    if (!ctx || canvas.width === 0 || canvas.height === 0) {
        return origToDataURL.apply(canvas, arguments);
    }
    ctx.drawImage(canvas, 0, 0);
    const imageData = ctx.getImageData(0, 0, copy.width, copy.height);
    for (let i = 0; i < imageData.data.length; i += 4) {
        imageData.data[i] += Math.floor(Math.random() * 3);
        imageData.data[i + 1] += Math.floor(Math.random() * 3);
        imageData.data[i + 2] += Math.floor(Math.random() * 3);
    }
    ctx.putImageData(imageData, 0, 0);
    return origToDataURL.apply(copy, arguments);
};
"#;

/// Every patch with a name for per-patch failure logging.
pub const PATCHES: &[(&str, &str)] = &[
    ("webdriver", WEBDRIVER_PATCH),
    ("user-agent-data", USER_AGENT_DATA_PATCH),
    ("chrome-runtime", CHROME_RUNTIME_PATCH),
    ("permissions", PERMISSIONS_PATCH),
    ("plugins", PLUGINS_PATCH),
    ("languages", LANGUAGES_PATCH),
    ("device-profile", DEVICE_PROFILE_PATCH),
    ("screen", SCREEN_PATCH),
    ("webgl", WEBGL_PATCH),
    ("canvas", CANVAS_PATCH),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_names_are_unique() {
        let mut names: Vec<&str> = PATCHES.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), PATCHES.len());
    }

    #[test]
    fn test_patches_target_expected_surfaces() {
        let find = |name: &str| {
            PATCHES
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, js)| *js)
                .unwrap()
        };
        assert!(find("webdriver").contains("navigator, 'webdriver'"));
        assert!(find("webgl").contains("37445"));
        assert!(find("canvas").contains("toDataURL"));
        assert!(find("chrome-runtime").contains("window.chrome"));
        assert!(find("device-profile").contains("hardwareConcurrency"));
    }

    #[test]
    fn test_patches_have_balanced_braces() {
        for (name, js) in PATCHES {
            let open = js.matches('{').count();
            let close = js.matches('}').count();
            assert_eq!(open, close, "unbalanced braces in {} patch", name);
        }
    }
}
