//! Windows platform integration.
//!
//! Monitor enumeration and the per-monitor DPI probe use Win32 GDI and
//! HiDpi APIs. On other targets every entry point reports the platform as
//! unsupported, so dependents can link this crate unconditionally.

use snapreel_common::config::EncoderCommand;
use snapreel_common::error::SnapreelResult;
use snapreel_platform_core::capability::{check_encoder, Capability};
use snapreel_platform_core::MonitorDescriptor;

/// Opt the process into per-monitor DPI awareness.
///
/// Must run once at startup, before any window or DC is created, so that
/// monitor rectangles are reported in physical pixels. Returns whether the
/// process is DPI aware afterwards.
pub fn init_dpi_awareness() -> bool {
    #[cfg(windows)]
    {
        win32::init_dpi_awareness()
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// Detect monitors on Windows.
pub fn detect_monitors() -> SnapreelResult<Vec<MonitorDescriptor>> {
    #[cfg(windows)]
    {
        snapreel_platform_core::resolve_monitors(&win32::Win32Displays, &win32::Win32DpiProbe)
    }
    #[cfg(not(windows))]
    {
        Err(snapreel_common::error::SnapreelError::unsupported(
            "Win32 monitor detection is only available on Windows",
        ))
    }
}

/// Capability report for Windows hosts.
pub fn check_capabilities(encoder: &EncoderCommand) -> Vec<Capability> {
    vec![
        check_encoder(encoder),
        Capability::new(
            "Desktop Duplication",
            "gdigrab desktop capture",
            cfg!(windows),
            true,
        )
        .with_fix("gdigrab capture requires a Windows desktop session"),
    ]
}

#[cfg(windows)]
pub mod win32 {
    use std::mem;

    use snapreel_common::error::{SnapreelError, SnapreelResult};
    use snapreel_platform_core::{DisplayEnumerator, DpiProbe, RawMonitor};
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT};
    use windows::Win32::Graphics::Gdi::{
        EnumDisplayMonitors, GetDC, GetDeviceCaps, GetMonitorInfoW, ReleaseDC, HDC, HMONITOR,
        LOGPIXELSX, MONITORINFOEXW, MONITORINFOF_PRIMARY,
    };
    use windows::Win32::UI::HiDpi::{
        GetDpiForWindow, SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    };
    use windows::Win32::UI::WindowsAndMessaging::{SetProcessDPIAware, WindowFromPoint};

    pub(crate) fn init_dpi_awareness() -> bool {
        unsafe {
            match SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(error = %e, "Per-monitor DPI awareness unavailable, using system awareness");
                    SetProcessDPIAware().as_bool()
                }
            }
        }
    }

    /// Enumerates monitors through `EnumDisplayMonitors`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct Win32Displays;

    impl DisplayEnumerator for Win32Displays {
        fn enumerate(&self) -> SnapreelResult<Vec<RawMonitor>> {
            unsafe extern "system" fn enum_proc(
                monitor: HMONITOR,
                _hdc: HDC,
                _rect: *mut RECT,
                data: LPARAM,
            ) -> BOOL {
                let monitors = unsafe { &mut *(data.0 as *mut Vec<RawMonitor>) };
                let mut info = MONITORINFOEXW::default();
                info.monitorInfo.cbSize = mem::size_of::<MONITORINFOEXW>() as u32;
                if unsafe { GetMonitorInfoW(monitor, &mut info.monitorInfo as *mut _ as *mut _) }
                    .as_bool()
                {
                    let rc = info.monitorInfo.rcMonitor;
                    let name_len = info
                        .szDevice
                        .iter()
                        .position(|&c| c == 0)
                        .unwrap_or(info.szDevice.len());
                    monitors.push(RawMonitor {
                        name: String::from_utf16_lossy(&info.szDevice[..name_len]),
                        x: rc.left,
                        y: rc.top,
                        width: (rc.right - rc.left).max(0) as u32,
                        height: (rc.bottom - rc.top).max(0) as u32,
                        primary: info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
                    });
                }
                BOOL(1)
            }

            let mut monitors: Vec<RawMonitor> = Vec::new();
            let ok = unsafe {
                EnumDisplayMonitors(
                    HDC::default(),
                    None,
                    Some(enum_proc),
                    LPARAM(&mut monitors as *mut Vec<RawMonitor> as isize),
                )
            };
            if !ok.as_bool() {
                return Err(SnapreelError::geometry("EnumDisplayMonitors failed"));
            }
            Ok(monitors)
        }
    }

    /// Win32 DPI tiers: covering window, its DC, then the screen DC.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct Win32DpiProbe;

    fn window_at_origin(monitor: &RawMonitor) -> SnapreelResult<HWND> {
        let hwnd = unsafe {
            WindowFromPoint(POINT {
                x: monitor.x,
                y: monitor.y,
            })
        };
        if hwnd.is_invalid() {
            return Err(SnapreelError::platform(format!(
                "no window covers the origin of {}",
                monitor.name
            )));
        }
        Ok(hwnd)
    }

    fn dc_dpi(hwnd: HWND) -> SnapreelResult<u32> {
        unsafe {
            let hdc = GetDC(hwnd);
            if hdc.is_invalid() {
                return Err(SnapreelError::platform("GetDC returned no device context"));
            }
            let dpi = GetDeviceCaps(hdc, LOGPIXELSX);
            ReleaseDC(hwnd, hdc);
            Ok(dpi.max(0) as u32)
        }
    }

    impl DpiProbe for Win32DpiProbe {
        fn window_dpi(&self, monitor: &RawMonitor) -> SnapreelResult<u32> {
            let hwnd = window_at_origin(monitor)?;
            Ok(unsafe { GetDpiForWindow(hwnd) })
        }

        fn display_dpi(&self, monitor: &RawMonitor) -> SnapreelResult<u32> {
            dc_dpi(window_at_origin(monitor)?)
        }

        fn primary_dpi(&self) -> SnapreelResult<u32> {
            dc_dpi(HWND::default())
        }
    }
}
