//! Windows UI Automation backend.
//!
//! `UiaDesktop` feeds `LayoutSessionProvider` with top-level windows, the UIA
//! element tree of the chosen window and synthetic mouse clicks.
//! `SendInputPaste` sends the Ctrl+V chord to the foreground window.

use std::collections::HashMap;
use std::ffi::c_void;
use std::mem;
use std::time::Duration;

use anyhow::{Context, Result};
use chatbridge_layout::{ControlNode, ControlType, WindowCandidate};
use windows::Win32::Foundation::{BOOL, CloseHandle, FALSE, HWND, LPARAM, TRUE};
use windows::Win32::System::Com::{
    CLSCTX_INPROC_SERVER, COINIT_MULTITHREADED, CoCreateInstance, CoInitializeEx,
};
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_NAME_FORMAT, PROCESS_QUERY_LIMITED_INFORMATION,
    QueryFullProcessImageNameW,
};
use windows::Win32::UI::Accessibility::{
    CUIAutomation8, IUIAutomation, IUIAutomationElement, IUIAutomationTreeWalker,
    UIA_ButtonControlTypeId, UIA_CONTROLTYPE_ID, UIA_CustomControlTypeId,
    UIA_DataGridControlTypeId, UIA_DocumentControlTypeId, UIA_EditControlTypeId,
    UIA_GroupControlTypeId, UIA_ListControlTypeId, UIA_ListItemControlTypeId,
    UIA_PaneControlTypeId, UIA_TableControlTypeId, UIA_TextControlTypeId,
    UIA_WindowControlTypeId,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBD_EVENT_FLAGS, KEYBDINPUT, KEYEVENTF_KEYUP,
    MOUSE_EVENT_FLAGS, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_MOVE, MOUSEEVENTF_VIRTUALDESK, MOUSEINPUT, SendInput, VIRTUAL_KEY, VK_CONTROL,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClassNameW, GetSystemMetrics, GetWindowTextW, GetWindowThreadProcessId,
    IsWindowVisible, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
    SM_YVIRTUALSCREEN, SetForegroundWindow,
};
use windows::core::PWSTR;

use crate::desktop::DesktopSession;
use crate::input::KeystrokeInjector;

/// Sibling enumeration stops here; chat clients with huge virtualised lists
/// only expose the visible rows anyway.
const MAX_CHILDREN: usize = 500;

const FOCUS_SETTLE: Duration = Duration::from_millis(30);
const PASTE_SETTLE: Duration = Duration::from_millis(60);

/// One UIA element plus the walker used to navigate from it.
#[derive(Clone)]
pub struct UiaControl {
    element: IUIAutomationElement,
    walker: IUIAutomationTreeWalker,
}

impl UiaControl {
    fn wrap(&self, element: IUIAutomationElement) -> Self {
        Self {
            element,
            walker: self.walker.clone(),
        }
    }
}

impl ControlNode for UiaControl {
    fn control_type(&self) -> ControlType {
        let id = unsafe { self.element.CurrentControlType() }.unwrap_or_default();
        control_type_from_id(id)
    }

    fn name(&self) -> String {
        unsafe { self.element.CurrentName() }
            .map(|name| name.to_string())
            .unwrap_or_default()
    }

    fn children(&self) -> Result<Vec<Self>> {
        let mut children = Vec::new();
        let mut next = unsafe { self.walker.GetFirstChildElement(&self.element) }.ok();
        while let Some(element) = next {
            if children.len() >= MAX_CHILDREN {
                tracing::trace!(max = MAX_CHILDREN, "child enumeration truncated");
                break;
            }
            next = unsafe { self.walker.GetNextSiblingElement(&element) }.ok();
            children.push(self.wrap(element));
        }
        Ok(children)
    }

    fn parent(&self) -> Option<Self> {
        unsafe { self.walker.GetParentElement(&self.element) }
            .ok()
            .map(|element| self.wrap(element))
    }
}

fn control_type_from_id(id: UIA_CONTROLTYPE_ID) -> ControlType {
    let known = [
        (UIA_WindowControlTypeId, ControlType::Window),
        (UIA_PaneControlTypeId, ControlType::Pane),
        (UIA_GroupControlTypeId, ControlType::Group),
        (UIA_ListControlTypeId, ControlType::List),
        (UIA_ListItemControlTypeId, ControlType::ListItem),
        (UIA_TableControlTypeId, ControlType::Table),
        (UIA_DataGridControlTypeId, ControlType::DataGrid),
        (UIA_EditControlTypeId, ControlType::Edit),
        (UIA_DocumentControlTypeId, ControlType::Document),
        (UIA_ButtonControlTypeId, ControlType::Button),
        (UIA_TextControlTypeId, ControlType::Text),
        (UIA_CustomControlTypeId, ControlType::Custom),
    ];
    known
        .into_iter()
        .find(|(known_id, _)| *known_id == id)
        .map_or_else(|| ControlType::Other(format!("UIA:{}", id.0)), |(_, control_type)| control_type)
}

/// Desktop access through the UIA COM client. Window handles are carried as
/// raw `isize` values.
pub struct UiaDesktop {
    automation: IUIAutomation,
    walker: IUIAutomationTreeWalker,
    foreground: Option<isize>,
}

impl UiaDesktop {
    /// Initialises COM on the calling thread and creates the UIA client. All
    /// later calls must stay on this thread.
    pub fn new() -> Result<Self> {
        if let Err(error) = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }.ok() {
            tracing::debug!(error = %error, "COM already initialised on this thread");
        }
        let automation: IUIAutomation =
            unsafe { CoCreateInstance(&CUIAutomation8, None, CLSCTX_INPROC_SERVER) }
                .context("failed to create UI Automation client")?;
        let walker = unsafe { automation.RawViewWalker() }
            .context("failed to create UI Automation tree walker")?;
        Ok(Self {
            automation,
            walker,
            foreground: None,
        })
    }
}

impl DesktopSession for UiaDesktop {
    type Control = UiaControl;
    type Window = isize;

    fn windows(&mut self) -> Result<Vec<WindowCandidate<isize>>> {
        let mut handles: Vec<isize> = Vec::new();
        unsafe { EnumWindows(Some(collect_window), LPARAM((&raw mut handles) as isize)) }
            .context("failed to enumerate top-level windows")?;
        Ok(handles
            .into_iter()
            .filter(|raw| unsafe { IsWindowVisible(hwnd_from(*raw)) }.as_bool())
            .map(|raw| {
                let hwnd = hwnd_from(raw);
                WindowCandidate::new(raw, window_class(hwnd), window_title(hwnd))
            })
            .collect())
    }

    fn executable_paths(&mut self) -> HashMap<isize, String> {
        let windows = match self.windows() {
            Ok(windows) => windows,
            Err(error) => {
                tracing::debug!(error = %error, "no executable paths without a window list");
                return HashMap::new();
            }
        };
        windows
            .into_iter()
            .filter_map(|candidate| {
                process_image_path(hwnd_from(candidate.handle)).map(|path| (candidate.handle, path))
            })
            .collect()
    }

    fn root_control(&mut self, window: &isize) -> Result<UiaControl> {
        let element = unsafe { self.automation.ElementFromHandle(hwnd_from(*window)) }
            .context("window is not reachable through UI Automation")?;
        self.foreground = Some(*window);
        Ok(UiaControl {
            element,
            walker: self.walker.clone(),
        })
    }

    /// Brings the last discovered window forward and clicks the centre of
    /// `control` with real mouse input.
    fn click(&mut self, control: &UiaControl) -> Result<()> {
        let rect = unsafe { control.element.CurrentBoundingRectangle() }
            .context("control has no bounding rectangle")?;
        if let Some(raw) = self.foreground {
            let _ = unsafe { SetForegroundWindow(hwnd_from(raw)) };
            std::thread::sleep(FOCUS_SETTLE);
        }

        let (origin_x, origin_y, width, height) = unsafe {
            (
                GetSystemMetrics(SM_XVIRTUALSCREEN),
                GetSystemMetrics(SM_YVIRTUALSCREEN),
                GetSystemMetrics(SM_CXVIRTUALSCREEN),
                GetSystemMetrics(SM_CYVIRTUALSCREEN),
            )
        };
        let x = absolute_coordinate(rect.left + (rect.right - rect.left) / 2, origin_x, width);
        let y = absolute_coordinate(rect.top + (rect.bottom - rect.top) / 2, origin_y, height);
        let flags = MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK | MOUSEEVENTF_MOVE;
        send_inputs(&[
            mouse_input(x, y, flags | MOUSEEVENTF_LEFTDOWN),
            mouse_input(x, y, flags | MOUSEEVENTF_LEFTUP),
        ])
    }
}

/// Sends Ctrl+V to whatever window has focus.
#[derive(Debug, Default)]
pub struct SendInputPaste;

impl KeystrokeInjector for SendInputPaste {
    fn paste(&mut self) -> Result<()> {
        let v = VIRTUAL_KEY(u16::from(b'V'));
        send_inputs(&[
            key_input(VK_CONTROL, false),
            key_input(v, false),
            key_input(v, true),
            key_input(VK_CONTROL, true),
        ])?;
        // The target reads the clipboard asynchronously; give it a moment
        // before the caller restores the previous contents.
        std::thread::sleep(PASTE_SETTLE);
        Ok(())
    }
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let handles = unsafe { &mut *(lparam.0 as *mut Vec<isize>) };
    handles.push(hwnd.0 as isize);
    TRUE
}

fn hwnd_from(raw: isize) -> HWND {
    HWND(raw as *mut c_void)
}

fn window_title(hwnd: HWND) -> String {
    let mut buffer = [0u16; 512];
    let len = unsafe { GetWindowTextW(hwnd, &mut buffer) };
    utf16_prefix(&buffer, len)
}

fn window_class(hwnd: HWND) -> String {
    let mut buffer = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buffer) };
    utf16_prefix(&buffer, len)
}

fn process_image_path(hwnd: HWND) -> Option<String> {
    let mut pid = 0u32;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&raw mut pid)) };
    if pid == 0 {
        return None;
    }
    let process = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid) }.ok()?;
    let mut buffer = [0u16; 1024];
    let mut len = buffer.len() as u32;
    let queried = unsafe {
        QueryFullProcessImageNameW(
            process,
            PROCESS_NAME_FORMAT(0),
            PWSTR(buffer.as_mut_ptr()),
            &raw mut len,
        )
    };
    let _ = unsafe { CloseHandle(process) };
    queried.ok()?;
    Some(utf16_prefix(&buffer, len as i32))
}

fn utf16_prefix(buffer: &[u16], len: i32) -> String {
    let len = usize::try_from(len).unwrap_or(0).min(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}

/// Maps a virtual-screen pixel to the 0..=65535 range `SendInput` expects.
fn absolute_coordinate(pixel: i32, origin: i32, extent: i32) -> i32 {
    let extent = i64::from(extent.max(1));
    let offset = i64::from(pixel - origin).clamp(0, extent);
    (offset * 65_535 / extent) as i32
}

fn mouse_input(x: i32, y: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: x,
                dy: y,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn key_input(key: VIRTUAL_KEY, release: bool) -> INPUT {
    let flags = if release {
        KEYEVENTF_KEYUP
    } else {
        KEYBD_EVENT_FLAGS(0)
    };
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: key,
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send_inputs(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        anyhow::bail!("input injection blocked: {sent} of {} events delivered", inputs.len());
    }
    Ok(())
}
