use crate::calibration::ScreenPoint;
use std::time::Duration;

#[cfg(target_os = "windows")]
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEINPUT, MOUSE_EVENT_FLAGS,
};

/// Interval between intermediate pointer positions while gliding.
const GLIDE_STEP: Duration = Duration::from_millis(10);

pub trait PointerPosition {
    fn pointer_position(&self) -> anyhow::Result<ScreenPoint>;
}

/// Synthetic pointer used to drive the host application.
///
/// There is a single virtual pointer and a single primary button; callers
/// must finish one gesture (button released) before starting the next.
pub trait InputDriver: PointerPosition {
    fn move_to(&mut self, point: ScreenPoint) -> anyhow::Result<()>;

    /// Move to `point` over `duration` so the host sees a drag, not a jump.
    fn glide_to(&mut self, point: ScreenPoint, duration: Duration) -> anyhow::Result<()>;

    fn button_down(&mut self) -> anyhow::Result<()>;

    fn button_up(&mut self) -> anyhow::Result<()>;

    fn click(&mut self) -> anyhow::Result<()> {
        self.button_down()?;
        self.button_up()
    }

    fn click_at(&mut self, point: ScreenPoint) -> anyhow::Result<()> {
        self.move_to(point)?;
        self.click()
    }

    /// Wait for the host UI to catch up.
    fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Intermediate positions for a glide from `from` to `to`, ending exactly on
/// `to`.
pub fn glide_path(from: ScreenPoint, to: ScreenPoint, duration: Duration) -> Vec<ScreenPoint> {
    let steps = (duration.as_millis() / GLIDE_STEP.as_millis()).max(1) as i64;
    (1..=steps)
        .map(|i| {
            let x = i64::from(from.x) + (i64::from(to.x) - i64::from(from.x)) * i / steps;
            let y = i64::from(from.y) + (i64::from(to.y) - i64::from(from.y)) * i / steps;
            ScreenPoint::new(x as i32, y as i32)
        })
        .collect()
}

/// Win32 `SendInput` backed driver.
#[derive(Debug, Default)]
pub struct SendInputDriver;

impl SendInputDriver {
    pub fn new() -> Self {
        Self
    }
}

impl PointerPosition for SendInputDriver {
    fn pointer_position(&self) -> anyhow::Result<ScreenPoint> {
        #[cfg(not(target_os = "windows"))]
        {
            anyhow::bail!("pointer input is only supported on Windows");
        }

        #[cfg(target_os = "windows")]
        {
            use windows::Win32::Foundation::POINT;
            use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

            let mut point = POINT::default();
            unsafe { GetCursorPos(&mut point) }?;
            Ok(ScreenPoint::new(point.x, point.y))
        }
    }
}

impl InputDriver for SendInputDriver {
    fn move_to(&mut self, point: ScreenPoint) -> anyhow::Result<()> {
        #[cfg(not(target_os = "windows"))]
        {
            let _ = point;
            anyhow::bail!("pointer input is only supported on Windows");
        }

        #[cfg(target_os = "windows")]
        {
            use windows::Win32::UI::WindowsAndMessaging::SetCursorPos;

            unsafe { SetCursorPos(point.x, point.y) }?;
            Ok(())
        }
    }

    fn glide_to(&mut self, point: ScreenPoint, duration: Duration) -> anyhow::Result<()> {
        let from = self.pointer_position()?;
        let path = glide_path(from, point, duration);
        let step = duration / path.len() as u32;
        for p in path {
            self.move_to(p)?;
            self.pause(step);
        }
        Ok(())
    }

    fn button_down(&mut self) -> anyhow::Result<()> {
        #[cfg(not(target_os = "windows"))]
        {
            anyhow::bail!("pointer input is only supported on Windows");
        }

        #[cfg(target_os = "windows")]
        {
            send_mouse(MOUSEEVENTF_LEFTDOWN)
        }
    }

    fn button_up(&mut self) -> anyhow::Result<()> {
        #[cfg(not(target_os = "windows"))]
        {
            anyhow::bail!("pointer input is only supported on Windows");
        }

        #[cfg(target_os = "windows")]
        {
            send_mouse(MOUSEEVENTF_LEFTUP)
        }
    }
}

#[cfg(target_os = "windows")]
fn send_mouse(flags: MOUSE_EVENT_FLAGS) -> anyhow::Result<()> {
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent == 0 {
        anyhow::bail!("SendInput returned 0");
    }
    Ok(())
}
