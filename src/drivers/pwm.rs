use embassy_stm32::gpio::OutputType;
use embassy_stm32::peripherals::{PA2, PA3, PB0, PB1, TIM2, TIM3};
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_stm32::timer::{Channel, CountingMode};

use crate::config::ESC_PWM_HZ;
use crate::drivers::escpwm::MotorOutput;

/// Four ESC lines on two timers.
///
/// M0 PB0 TIM3_CH3, M1 PB1 TIM3_CH4, M2 PA3 TIM2_CH4, M3 PA2 TIM2_CH3.
pub struct Escs<'d> {
    tim3: SimplePwm<'d, TIM3>,
    tim2: SimplePwm<'d, TIM2>,
}

impl<'d> Escs<'d> {
    /// Starts every output at `initial` (compare fraction) before enabling.
    pub fn new(
        tim3: TIM3,
        tim2: TIM2,
        pb0: PB0,
        pb1: PB1,
        pa2: PA2,
        pa3: PA3,
        initial: f32,
    ) -> Self {
        let tim3 = SimplePwm::new(
            tim3,
            None,
            None,
            Some(PwmPin::new_ch3(pb0, OutputType::PushPull)),
            Some(PwmPin::new_ch4(pb1, OutputType::PushPull)),
            Hertz(ESC_PWM_HZ),
            CountingMode::EdgeAlignedUp,
        );
        let tim2 = SimplePwm::new(
            tim2,
            None,
            None,
            Some(PwmPin::new_ch3(pa2, OutputType::PushPull)),
            Some(PwmPin::new_ch4(pa3, OutputType::PushPull)),
            Hertz(ESC_PWM_HZ),
            CountingMode::EdgeAlignedUp,
        );

        let mut escs = Self { tim3, tim2 };
        for m in 0..4 {
            escs.set_motor_duty_cycle(m, initial);
        }
        escs.tim3.enable(Channel::Ch3);
        escs.tim3.enable(Channel::Ch4);
        escs.tim2.enable(Channel::Ch3);
        escs.tim2.enable(Channel::Ch4);
        escs
    }
}

fn compare(max: u16, value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * max as f32) as u16
}

impl<'d> MotorOutput for Escs<'d> {
    fn set_motor_duty_cycle(&mut self, index: usize, value: f32) {
        match index {
            0 => {
                let c = compare(self.tim3.get_max_duty(), value);
                self.tim3.set_duty(Channel::Ch3, c);
            }
            1 => {
                let c = compare(self.tim3.get_max_duty(), value);
                self.tim3.set_duty(Channel::Ch4, c);
            }
            2 => {
                let c = compare(self.tim2.get_max_duty(), value);
                self.tim2.set_duty(Channel::Ch4, c);
            }
            3 => {
                let c = compare(self.tim2.get_max_duty(), value);
                self.tim2.set_duty(Channel::Ch3, c);
            }
            _ => {}
        }
    }
}
